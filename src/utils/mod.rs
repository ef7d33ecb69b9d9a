pub mod employee_directory;
pub mod multipart_form;
