pub mod enumerate;
pub mod scanner;
