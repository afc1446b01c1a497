pub mod blog;
pub mod blog_image;
pub mod photo;
pub mod project;
pub mod project_image;
