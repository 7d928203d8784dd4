pub mod cjk;
pub mod gate;
pub mod noise;
pub mod scope;
