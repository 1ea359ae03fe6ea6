pub mod imports;
pub mod read;
pub mod sections;
