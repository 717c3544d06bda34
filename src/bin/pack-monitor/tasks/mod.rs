pub mod can_task;
pub mod console_task;
pub mod sampler_task;
