mod ad_consistency_tests;
mod classification_tests;
mod property_tests;
