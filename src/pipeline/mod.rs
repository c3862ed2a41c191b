pub mod capture;
pub mod flow;
pub mod packet;
pub mod source;
pub mod supervisor;
