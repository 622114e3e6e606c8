pub mod normalize;
pub mod score;

pub use normalize::Normalizer;
pub use score::{ClassifierSettings, RoleClassifier};
