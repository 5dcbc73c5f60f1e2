//! `Typed` implementations for standard and ecosystem types.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::path::PathBuf;

use regex::Regex;
use url::Url;
use uuid::Uuid;

use crate::node::ConfigNode;
use crate::types::{MapOps, OptionOps, SeqOps, TypeKind, TypeToken, Typed};

macro_rules! scalar_types {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Typed for $ty {
                fn type_token() -> TypeToken {
                    TypeToken::memoize::<$ty>(TypeToken::scalar::<$ty>)
                }
            }
        )*
    };
}

scalar_types!(
    bool, char, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, String, PathBuf,
    Uuid, Url, Regex,
);

impl Typed for ConfigNode {
    fn type_token() -> TypeToken {
        TypeToken::memoize::<Self>(TypeToken::node::<Self>)
    }
}

impl<T: Typed> Typed for Option<T> {
    fn type_token() -> TypeToken {
        TypeToken::memoize::<Self>(|| {
            TypeToken::with_kind::<Self>(TypeKind::Option {
                inner: T::type_token(),
                ops: OptionOps::of::<T>(),
            })
        })
    }
}

impl<T: Typed> Typed for Vec<T> {
    fn type_token() -> TypeToken {
        TypeToken::memoize::<Self>(|| {
            TypeToken::with_kind::<Self>(TypeKind::List {
                element: T::type_token(),
                ops: SeqOps::vec::<T>(),
            })
        })
    }
}

impl<T: Typed + Eq + Hash> Typed for HashSet<T> {
    fn type_token() -> TypeToken {
        TypeToken::memoize::<Self>(|| {
            TypeToken::with_kind::<Self>(TypeKind::Set {
                element: T::type_token(),
                ops: SeqOps::hash_set::<T>(),
            })
        })
    }
}

impl<T: Typed + Ord> Typed for BTreeSet<T> {
    fn type_token() -> TypeToken {
        TypeToken::memoize::<Self>(|| {
            TypeToken::with_kind::<Self>(TypeKind::Set {
                element: T::type_token(),
                ops: SeqOps::btree_set::<T>(),
            })
        })
    }
}

impl<T: Typed, const N: usize> Typed for [T; N] {
    fn type_token() -> TypeToken {
        TypeToken::memoize::<Self>(|| {
            TypeToken::with_kind::<Self>(TypeKind::Array {
                element: T::type_token(),
                len: N,
                ops: SeqOps::array::<T, N>(),
            })
        })
    }
}

impl<K: Typed + Eq + Hash, V: Typed> Typed for HashMap<K, V> {
    fn type_token() -> TypeToken {
        TypeToken::memoize::<Self>(|| {
            TypeToken::with_kind::<Self>(TypeKind::Map {
                key: K::type_token(),
                value: V::type_token(),
                ops: MapOps::hash_map::<K, V>(),
            })
        })
    }
}

impl<K: Typed + Ord, V: Typed> Typed for BTreeMap<K, V> {
    fn type_token() -> TypeToken {
        TypeToken::memoize::<Self>(|| {
            TypeToken::with_kind::<Self>(TypeKind::Map {
                key: K::type_token(),
                value: V::type_token(),
                ops: MapOps::btree_map::<K, V>(),
            })
        })
    }
}
