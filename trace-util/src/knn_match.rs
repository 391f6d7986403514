use std::collections::HashMap;
use std::fmt::{Debug, Display};

/// A dictionary (HnswMap wrapper) for fast column look-up
pub struct ColumnDict<T> {
    pub dict: instant_distance::HnswMap<VecPoint, T>,
    pub data_vec: Vec<VecPoint>,
    pub name2index: HashMap<T, usize>,
}

impl<T> ColumnDict<T>
where
    T: Clone + Eq + std::hash::Hash + Debug + Display,
{
    pub fn names(&self) -> &Vec<T> {
        &self.dict.values
    }

    pub fn from_dvector_views(data: Vec<nalgebra::DVectorView<f32>>, names: Vec<T>) -> Self {
        let points = data.iter().map(|x| x.to_vp()).collect();
        Self::from_points(points, names)
    }

    /// Build from a `(d x n)` matrix where each column is a point
    pub fn from_dmatrix(data: nalgebra::DMatrix<f32>, names: Vec<T>) -> Self {
        let points = data.column_iter().map(|x| x.to_vp()).collect();
        Self::from_points(points, names)
    }

    fn from_points(data_vec: Vec<VecPoint>, names: Vec<T>) -> Self {
        debug_assert!(
            data_vec.len() == names.len(),
            "data and names must have the same length"
        );

        let mut name2index = HashMap::<T, usize>::new();
        names.iter().enumerate().for_each(|(j, x)| {
            name2index.insert(x.clone(), j);
        });

        use instant_distance::Builder;
        let dict = Builder::default().build(data_vec.clone(), names);

        ColumnDict {
            dict,
            data_vec,
            name2index,
        }
    }

    /// k-nearest neighbours of a named point, excluding the point itself
    ///
    /// * `query_name` - the name of the point to search around
    /// * `knn` - the number of nearest neighbours to return
    pub fn search_others(&self, query_name: &T, knn: usize) -> anyhow::Result<(Vec<T>, Vec<f32>)> {
        use instant_distance::Search;

        let self_idx = self
            .name2index
            .get(query_name)
            .ok_or_else(|| anyhow::anyhow!("name {} not found", query_name))?;

        let query = &self.data_vec[*self_idx];
        let mut search = Search::default();

        let mut names = Vec::with_capacity(knn);
        let mut distances = Vec::with_capacity(knn);

        for v in self.dict.search(query, &mut search) {
            if v.value == query_name {
                continue;
            }
            names.push(v.value.clone());
            distances.push(v.distance);
            if names.len() >= knn {
                break;
            }
        }

        Ok((names, distances))
    }

    /// k-nearest neighbours of an arbitrary query point
    pub fn search_by_query_data(
        &self,
        query: &VecPoint,
        knn: usize,
    ) -> anyhow::Result<(Vec<T>, Vec<f32>)> {
        use instant_distance::Search;

        let mut search = Search::default();
        let mut names = Vec::with_capacity(knn);
        let mut distances = Vec::with_capacity(knn);

        for v in self.dict.search(query, &mut search).take(knn) {
            names.push(v.value.clone());
            distances.push(v.distance);
        }

        Ok((names, distances))
    }
}

#[derive(Clone, Debug)]
/// a wrapper for `Vec<f32>`
pub struct VecPoint {
    pub data: Vec<f32>,
}

pub trait MakeVecPoint {
    fn to_vp(&self) -> VecPoint;
}

impl MakeVecPoint for Vec<f32> {
    fn to_vp(&self) -> VecPoint {
        VecPoint { data: self.clone() }
    }
}

impl MakeVecPoint for nalgebra::DVectorView<'_, f32> {
    fn to_vp(&self) -> VecPoint {
        VecPoint {
            data: self.iter().cloned().collect(),
        }
    }
}

impl instant_distance::Point for VecPoint {
    fn distance(&self, other: &Self) -> f32 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(x, y)| (x - y) * (x - y))
            .sum::<f32>()
            .sqrt()
    }
}
