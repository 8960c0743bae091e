mod concurrency_test;
mod filesystem_store_test;
mod history_test;
mod merge_test;
