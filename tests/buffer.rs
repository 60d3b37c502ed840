use libiotc::State;
use libiotc::memory::{ByteBuffer, Ownership};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn test_growth_is_next_power_of_two_and_keeps_content() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..20 {
        let mut buffer = ByteBuffer::with_capacity(rng.gen_range(0..8)).unwrap();
        let mut expected = Vec::new();
        for _ in 0..40 {
            let chunk: Vec<u8> = (0..rng.gen_range(0..50)).map(|_| rng.r#gen()).collect();
            let before = buffer.capacity();
            let needed = buffer.len() + chunk.len();
            buffer.append_with_resize(&chunk).unwrap();
            expected.extend_from_slice(&chunk);

            if needed > before {
                assert_eq!(buffer.capacity(), needed.next_power_of_two());
            } else {
                assert_eq!(buffer.capacity(), before);
            }
            assert_eq!(buffer.as_slice(), expected.as_slice());
        }
    }
}

#[test]
fn test_fixed_buffer_overflow_leaves_content() {
    let mut rng = StdRng::seed_from_u64(12);
    for _ in 0..100 {
        let capacity = rng.gen_range(1..64);
        let mut buffer = ByteBuffer::with_capacity(capacity).unwrap();
        let fill: Vec<u8> = (0..rng.gen_range(0..=capacity)).map(|_| rng.r#gen()).collect();
        buffer.append(&fill).unwrap();

        let room = capacity - fill.len();
        let extra = vec![0xAA; room + rng.gen_range(1..16)];
        assert_eq!(buffer.append(&extra), Err(State::BufferOverflow));
        assert_eq!(buffer.len(), fill.len());
        assert_eq!(buffer.as_slice(), fill.as_slice());
        assert_eq!(buffer.capacity(), capacity);
    }
}

#[test]
fn test_shared_buffer_copies_on_resize() {
    let source = *b"abc";
    let mut buffer = ByteBuffer::share(&source);
    assert_eq!(buffer.ownership(), Ownership::Borrowed);
    assert_eq!(buffer.append(b"d"), Err(State::BufferOverflow));

    buffer.append_with_resize(b"d").unwrap();
    assert_eq!(buffer.ownership(), Ownership::Owned);
    assert_eq!(buffer.as_slice(), b"abcd");
    assert_eq!(buffer.capacity(), 4);
    assert_eq!(&source, b"abc");
}

#[test]
fn test_string_copy_reserves_terminator() {
    let buffer = ByteBuffer::copy_from_str("topic").unwrap();
    assert_eq!(buffer.len(), 5);
    assert_eq!(buffer.capacity(), 6);
    assert_eq!(buffer.as_str(), Some("topic"));
}
