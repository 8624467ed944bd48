//! Unit test modules.

mod calibration_test;
mod calorie_test;
mod ftms_parser_test;
mod tcx_export_test;
