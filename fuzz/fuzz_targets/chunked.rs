#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use lrucached::protocol::{Command, Error, Parser};

#[derive(Debug, Arbitrary)]
struct Case {
    data: Vec<u8>,
    splits: Vec<u8>,
}

#[derive(Debug, PartialEq)]
enum Outcome {
    Command(Command),
    Error(Error),
}

// Runs the parser over `data` delivered in `chunks`, collecting every
// command and error produced. Stops at a fatal error the way a
// connection would.
fn drive(data: &[u8], chunks: &[usize]) -> Vec<Outcome> {
    let mut parser = Parser::new();
    let mut outcomes = Vec::new();
    let mut buffered: Vec<u8> = Vec::new();
    let mut fed = 0;
    let mut chunk_at = 0;
    loop {
        if buffered.is_empty() {
            if fed >= data.len() {
                break;
            }
            let step = chunks.get(chunk_at).copied().unwrap_or(data.len());
            chunk_at += 1;
            let step = step.clamp(1, data.len() - fed);
            buffered.extend_from_slice(&data[fed..fed + step]);
            fed += step;
        }
        let (consumed, outcome) = parser.parse(&buffered);
        assert!(consumed <= buffered.len());
        buffered.drain(..consumed);
        match outcome {
            Ok(true) => {
                let (command, _) = parser.build().expect("ready parser must build");
                outcomes.push(Outcome::Command(command));
            }
            Ok(false) => {
                // a partial header is fully consumed into the parser
                assert!(buffered.is_empty());
            }
            Err(err) => {
                outcomes.push(Outcome::Error(err));
                if err.is_fatal() {
                    break;
                }
                parser.reset();
            }
        }
    }
    outcomes
}

// Feeding the same bytes in arbitrary chunk sizes must produce the same
// command and error stream as feeding them whole.
fuzz_target!(|case: Case| {
    let whole = drive(&case.data, &[case.data.len().max(1)]);
    let splits: Vec<usize> = case.splits.iter().map(|&split| split as usize + 1).collect();
    let chunked = drive(&case.data, &splits);
    assert_eq!(whole, chunked);
});
