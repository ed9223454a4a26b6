//! Integration scenarios spanning the core engine and the file adapters

#[cfg(test)]
mod engine_integration;
#[cfg(test)]
mod render_integration;
