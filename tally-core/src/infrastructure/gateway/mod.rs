pub mod template;

pub use template::TemplateGateway;
