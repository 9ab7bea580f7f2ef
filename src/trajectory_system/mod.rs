pub mod dynamics;
pub mod kinematics;
pub mod paths;
pub mod prediction;
