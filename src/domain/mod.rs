pub mod auth;
pub mod task_list;
pub mod task_parser;
pub mod task_view;
pub mod todo;

#[cfg(test)]
pub(crate) mod test_util;
