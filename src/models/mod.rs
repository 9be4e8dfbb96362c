pub mod converter_model;
