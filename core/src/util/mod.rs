pub mod constants;
pub mod levenshtein;
