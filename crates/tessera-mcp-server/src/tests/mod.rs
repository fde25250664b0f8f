mod tools_call_tests;
