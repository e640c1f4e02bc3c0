pub mod dispatcher_args;
pub mod identity;
