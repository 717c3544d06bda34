pub mod ads1110;
pub mod switch_matrix;
