#![no_main]

use libfuzzer_sys::fuzz_target;
use lrucached::protocol::Parser;

// The parser must make monotonic progress on arbitrary input and never
// panic.
fuzz_target!(|data: &[u8]| {
    let mut parser = Parser::new();
    let mut rest = data;
    while !rest.is_empty() {
        let (consumed, outcome) = parser.parse(rest);
        assert!(consumed <= rest.len());
        match outcome {
            Ok(true) => {
                let (command, body_len) = parser.build().expect("ready parser must build");
                assert_eq!(command.body_len(), body_len);
            }
            Ok(false) => {
                if consumed == 0 {
                    break;
                }
            }
            Err(_) => parser.reset(),
        }
        rest = &rest[consumed..];
    }
});
