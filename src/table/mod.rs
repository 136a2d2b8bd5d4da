mod column;
mod frame;
mod matrix;
mod song;
mod vector;


pub use column::{Column, Value};
pub use frame::{FeatureTable, Record};
pub use matrix::Matrix;
pub use song::{Catalog, Song, CLUSTER_ID, SONG_FEATURES};
pub use vector::FeatureVector;
