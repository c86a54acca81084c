//! Sum types whose fields are containers, pointers and other sum types.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    sync::{Arc, OnceLock},
};

use bytes::Bytes;
use sumpack::{Resolver, Union};

#[derive(Debug, Clone, PartialEq, Union)]
#[sumpack(int_keys)]
enum Expr {
    Number(f64),
    Negate(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Call { name: String, args: Vec<Expr> },
}

#[test]
fn recursive_union_round_trip() {
    let resolver = Resolver::new();
    let expr = Expr::Add(
        Box::new(Expr::Number(1.0)),
        Box::new(Expr::Negate(Box::new(Expr::Call {
            name: "max".to_owned(),
            args: vec![Expr::Number(2.0), Expr::Number(3.0)],
        }))),
    );

    let bytes = resolver.serialize(&expr).unwrap();
    assert_eq!(resolver.deserialize::<Expr>(&bytes).unwrap(), expr);
}

#[test]
fn deep_nesting() {
    let resolver = Resolver::new();
    let mut expr = Expr::Number(0.0);
    for _ in 0..64 {
        expr = Expr::Negate(Box::new(expr));
    }

    let bytes = resolver.serialize(&expr).unwrap();
    assert_eq!(resolver.deserialize::<Expr>(&bytes).unwrap(), expr);
}

#[derive(Debug, Clone, PartialEq, Union)]
enum Tree<T> {
    Leaf(T),
    Node { left: Box<Tree<T>>, right: Box<Tree<T>> },
}

#[test]
fn generic_instantiations_cache_independently() {
    let resolver = Resolver::new();

    let ints = Tree::Node {
        left: Box::new(Tree::Leaf(1i32)),
        right: Box::new(Tree::Leaf(2)),
    };
    let names = Tree::Leaf("one".to_owned());

    let int_bytes = resolver.serialize(&ints).unwrap();
    let name_bytes = resolver.serialize(&names).unwrap();

    assert!(resolver.contains::<Tree<i32>>());
    assert!(resolver.contains::<Tree<String>>());
    assert!(!resolver.contains::<Tree<u8>>());

    assert_eq!(resolver.deserialize::<Tree<i32>>(&int_bytes).unwrap(), ints);
    assert_eq!(
        resolver.deserialize::<Tree<String>>(&name_bytes).unwrap(),
        names
    );

    // Leaf(1) under string keys: [0, {"0": 1}]
    let leaf = resolver.serialize(&Tree::Leaf(1i32)).unwrap();
    assert_eq!(leaf, [0x92, 0x00, 0x81, 0xa1, b'0', 0x01]);
}

#[derive(Debug, Clone, PartialEq, Union)]
enum Record {
    Full {
        text: String,
        raw: Bytes,
        letter: char,
        flag: bool,
        nothing: (),
        queue: VecDeque<u16>,
        ordered: BTreeMap<String, i64>,
        unique: BTreeSet<u8>,
        shared: Arc<String>,
        maybe: Option<i8>,
    },
    Maps {
        by_name: HashMap<String, Vec<u32>>,
        seen: HashSet<u64>,
    },
}

#[test]
fn container_fields_round_trip() {
    let resolver = Resolver::new();

    let full = Record::Full {
        text: "héllo".to_owned(),
        raw: Bytes::from_static(&[0, 1, 2, 255]),
        letter: 'λ',
        flag: true,
        nothing: (),
        queue: VecDeque::from([1, 2, 3]),
        ordered: BTreeMap::from([("a".to_owned(), -1), ("b".to_owned(), 2)]),
        unique: BTreeSet::from([3, 1, 2]),
        shared: Arc::new("shared".to_owned()),
        maybe: None,
    };

    let maps = Record::Maps {
        by_name: HashMap::from([
            ("x".to_owned(), vec![1, 2]),
            ("y".to_owned(), Vec::new()),
        ]),
        seen: HashSet::from([u64::MAX, 0]),
    };

    for record in [full, maps] {
        let bytes = resolver.serialize(&record).unwrap();
        assert_eq!(resolver.deserialize::<Record>(&bytes).unwrap(), record);
    }
}

#[test]
fn optional_union_fields() {
    #[derive(Debug, Clone, PartialEq, Union)]
    enum Wrapper {
        Holds { inner: Option<Box<Expr>> },
    }

    let resolver = Resolver::new();

    for inner in [None, Some(Box::new(Expr::Number(4.0)))] {
        let value = Wrapper::Holds { inner };
        let bytes = resolver.serialize(&value).unwrap();
        assert_eq!(resolver.deserialize::<Wrapper>(&bytes).unwrap(), value);
    }

    // {"inner": nil}
    let bytes = resolver.serialize(&Wrapper::Holds { inner: None }).unwrap();
    assert_eq!(bytes[bytes.len() - 1], 0xc0);
}

#[derive(Debug, PartialEq, Union)]
#[sumpack(int_keys)]
enum Cached {
    Entry { key: u32, value: OnceLock<String> },
}

#[test]
fn deferred_values() {
    let resolver = Resolver::new();

    let ready = Cached::Entry {
        key: 1,
        value: OnceLock::from("hit".to_owned()),
    };
    let bytes = resolver.serialize(&ready).unwrap();
    assert_eq!(bytes, [0x92, 0x00, 0x92, 0x01, 0xa3, b'h', b'i', b't']);
    assert_eq!(resolver.deserialize::<Cached>(&bytes).unwrap(), ready);

    // an empty cell is nil and decodes empty
    let pending = Cached::Entry { key: 2, value: OnceLock::new() };
    let bytes = resolver.serialize(&pending).unwrap();
    assert_eq!(bytes, [0x92, 0x00, 0x92, 0x02, 0xc0]);

    let Cached::Entry { value, .. } =
        resolver.deserialize::<Cached>(&bytes).unwrap();
    assert!(value.get().is_none());

    // a cell set after the write-out does not change what was written
    let cell = OnceLock::new();
    let before = resolver.serialize(&cell).unwrap();
    cell.set(7u8).unwrap();
    assert_eq!(before, [0xc0]);
    assert_eq!(resolver.serialize(&cell).unwrap(), [0x07]);
    assert_eq!(resolver.deserialize::<OnceLock<u8>>(&[0x07]).unwrap(), cell);
}
