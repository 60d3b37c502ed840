use libiotc::mqtt::match_topics;

#[test]
fn test_match_topics_table() {
    let cases: &[(Option<&str>, Option<&str>, u8)] = &[
        // plain topics
        (Some("long_topic_name_same_length_1"), Some("long_topic_name_same_length_2"), 1),
        (Some("long_topic_name_same_length_2"), Some("long_topic_name_same_length_1"), 1),
        (Some("long_topic_name"), Some("long_topic_name_different_length"), 1),
        (Some("long_topic_name_different_length"), Some("short"), 1),
        (Some("t1"), Some("t2"), 1),
        (Some("t"), Some("t"), 0),
        (Some("t"), Some("t/"), 1),
        (Some("t/subfolder"), Some("t"), 1),
        // multi-level wildcard
        (Some("t1/#"), Some("t2"), 1),
        (Some("t/#"), Some("t"), 0),
        (Some("t/#"), Some("t/"), 0),
        (Some("t/#"), Some("t/subfolder"), 0),
        (Some("t1/#"), Some("t2/subfolder"), 1),
        (Some("multi/level/#"), Some("multi/level"), 0),
        (Some("multi/level/#"), Some("multi/level/"), 0),
        (Some("multi/level/#"), Some("multi/level/topic"), 0),
        (Some("multi/level/#"), Some("multi/level/topic/"), 0),
        (Some("multi/level/#"), Some("multi/level/topic/name"), 0),
        (Some("multi/level/#"), Some("multi/level/topic/name/"), 0),
        (Some("multi/level/#"), Some("multi/leve"), 1),
        (Some("multi/level/#"), Some("multi/level2"), 1),
        (Some("multi/level/#"), Some("multi/level2/topic/name"), 1),
        (Some("multi/#"), Some("multi/level/topic/name"), 0),
        // missing or empty
        (None, Some("short"), 1),
        (Some("sub"), None, 1),
        (None, None, 1),
        (Some("#"), None, 1),
        (Some("#"), Some(""), 1),
        (Some(""), Some(""), 1),
        // root wildcard
        (Some("#"), Some("t"), 0),
        (Some("#"), Some("long_topic_name"), 0),
        (Some("#"), Some("multi/level/topic/name"), 0),
        (Some("#"), Some("anything"), 0),
    ];

    for (filter, topic, expected) in cases {
        assert_eq!(
            match_topics(*filter, *topic),
            *expected,
            "filter {:?} against topic {:?}",
            filter,
            topic
        );
    }
}

#[test]
fn test_plus_is_literal() {
    assert_eq!(match_topics(Some("a/+/c"), Some("a/b/c")), 1);
    assert_eq!(match_topics(Some("+/+"), Some("/")), 1);
    assert_eq!(match_topics(Some("a/+"), Some("a/+")), 0);
    assert_eq!(match_topics(Some("t/#"), Some("tt/x")), 1);
}
