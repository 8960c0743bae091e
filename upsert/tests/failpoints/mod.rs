mod filesystem_store_test;
