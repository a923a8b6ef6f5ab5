//! Library half of the ansible-role-test CLI: test playbook generation and
//! the container run driving it

pub mod playbook;
pub mod runner;
