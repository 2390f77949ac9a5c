pub mod dag;
pub mod naming;
pub mod paths;
pub mod relations;
pub mod visualize;
