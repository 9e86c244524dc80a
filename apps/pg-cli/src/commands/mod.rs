pub mod agent;
pub mod audit;
pub mod check;
pub mod compliance;
pub mod policy;
pub mod serve;
