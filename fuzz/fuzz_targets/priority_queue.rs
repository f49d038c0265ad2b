#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use perceptor_core::priority_queue::PriorityQueue;

#[derive(Arbitrary, Debug)]
enum Op {
    Add { key: u8, priority: i64 },
    Set { key: u8, priority: i64 },
    Remove { key: u8 },
    Pop,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut queue: PriorityQueue<u8, u8> = PriorityQueue::new();

    for op in ops.iter().take(256) {
        match *op {
            Op::Add { key, priority } => {
                let existed = queue.has_key(&key);
                assert_eq!(queue.add(key, priority, key).is_err(), existed);
            }
            Op::Set { key, priority } => {
                let existed = queue.has_key(&key);
                assert_eq!(queue.set(&key, priority).is_ok(), existed);
            }
            Op::Remove { key } => {
                let existed = queue.has_key(&key);
                assert_eq!(queue.remove(&key).is_ok(), existed);
                assert!(!queue.has_key(&key));
            }
            Op::Pop => {
                let top = queue.peek().map(|(_, priority, _)| priority);
                match queue.pop() {
                    Ok(_) => assert!(top.is_some()),
                    Err(_) => assert!(queue.is_empty()),
                }
            }
        }
        assert!(queue.check_validity().is_empty(), "{:?}", queue.check_validity());
    }
});
