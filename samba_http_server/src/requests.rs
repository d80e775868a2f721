use rocket::serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
#[serde(crate = "rocket::serde")]
pub struct NewTrace {
    pub algorithm: String,
    pub k: usize,
    pub budget: usize,
    pub dataset: String,
    pub threshold: f64,
}
