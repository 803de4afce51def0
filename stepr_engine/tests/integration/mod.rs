mod harness;
mod lifecycle;
mod loops;
mod motion_program;
mod properties;
