pub mod action;
pub mod q_learning;
pub mod q_table;
pub mod reward;
pub mod state;
