pub mod image_pipeline;
pub mod logger;

#[cfg(test)]
mod test_utils;
