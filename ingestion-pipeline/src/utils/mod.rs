pub mod file_text_extraction;
