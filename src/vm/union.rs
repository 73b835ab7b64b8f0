use crate::{
    common::data::{
        canonical,
        Data,
        Kind,
    },
    vm::Repr,
};

/// The portable encoding: an explicit tagged union.
/// Used wherever NaN-tagging is unavailable or turned off;
/// behaves exactly like [`Tagged`](crate::vm::tag::Tagged),
/// including NaN canonicalization.
#[derive(Debug, Clone)]
pub struct Union(Data);

impl Repr for Union {
    fn encode(data: Data) -> Union {
        match data {
            Data::Float64(f) => Union(Data::Float64(canonical(f))),
            other => Union(other),
        }
    }

    fn kind(&self) -> Kind { self.0.kind() }

    fn decode(&self) -> Data { self.0.clone() }

    fn truthy(&self) -> bool { !matches!(self.0, Data::Nil | Data::Bool(false)) }

    fn integer(&self) -> Option<i32> {
        match self.0 {
            Data::Int32(i) => Some(i),
            _ => None,
        }
    }

    fn real(&self) -> Option<f64> {
        match self.0 {
            Data::Float64(f) => Some(f),
            _ => None,
        }
    }

    fn identical(&self, other: &Union) -> bool {
        match (&self.0, &other.0) {
            (Data::Float64(a), Data::Float64(b)) => a.to_bits() == b.to_bits(),
            (a, b) if a.kind().is_reference() => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod test {
    use std::rc::Rc;

    use super::*;
    use crate::{
        common::{
            data::CANONICAL_NAN,
            string::Str,
        },
        vm::tag::Tagged,
    };

    #[test]
    fn nan_matches_packed() {
        let weird = f64::from_bits(0xFFF8_0000_0000_0042);
        let union = Union::encode(Data::Float64(weird));
        let tagged = Tagged::encode(Data::Float64(weird));

        assert_eq!(union.real().unwrap().to_bits(), CANONICAL_NAN);
        assert_eq!(union.real().unwrap().to_bits(), tagged.real().unwrap().to_bits());
    }

    #[test]
    fn same_observable_behaviour() {
        let samples = vec![
            Data::Nil,
            Data::Bool(true),
            Data::Bool(false),
            Data::Int32(-7),
            Data::Float64(-0.0),
            Data::Float64(f64::INFINITY),
            Data::String(Rc::new(Str::from("hello"))),
            Data::Symbol(Rc::new(Str::from("hello"))),
        ];

        for data in samples {
            let union = Union::encode(data.clone());
            let tagged = Tagged::encode(data.clone());
            assert_eq!(union.kind(), tagged.kind());
            assert_eq!(union.truthy(), tagged.truthy());
            assert_eq!(union.integer(), tagged.integer());
            assert_eq!(union.decode(), tagged.decode());
        }
    }

    #[test]
    fn negative_zero() {
        let zero = Union::encode(Data::Float64(-0.0)).real().unwrap();
        assert_eq!(1.0 / zero, f64::NEG_INFINITY);
    }
}
