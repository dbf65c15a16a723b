pub mod discovery;
pub mod seo;
