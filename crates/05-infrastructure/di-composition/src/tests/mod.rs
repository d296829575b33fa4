//! 组合层测试

mod builder_tests;
