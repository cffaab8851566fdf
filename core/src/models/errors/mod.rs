mod invalid_enum;

pub use invalid_enum::InvalidEnum;
