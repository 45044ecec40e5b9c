pub mod marketmodel;
pub mod usermodel;
