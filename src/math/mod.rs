use num_traits::{FromPrimitive, ToPrimitive, Zero};
use core::ops::{Add, Div, Mul, Sub};

// we define numbers as ring including the additive and multiplicative inverses
// comutation on multiplication is implied (monoid). Sample windows need a zero
// to pad unwritten slots and an ordering to find bank spreads.
pub trait Number: Copy + Sub<Output = Self> + Add<Output = Self> +
    Div<Output = Self> + Mul<Output = Self> + FromPrimitive + ToPrimitive + Zero + PartialOrd {}

impl<T> Number for T where T: Copy + Sub<Output = T> + Add<Output = T> + Div<Output = T> +
    Mul<Output = T> + FromPrimitive + ToPrimitive + Zero + PartialOrd {}

/// Largest minus smallest value of a non-empty slice, `None` if empty.
pub fn spread<T: Number>(values: &[T]) -> Option<T> {
    let (first, rest) = values.split_first()?;
    let (mut low, mut high) = (*first, *first);
    for v in rest {
        if *v < low {
            low = *v;
        }
        if *v > high {
            high = *v;
        }
    }

    Some(high - low)
}

#[cfg(test)]
mod tests {
    use super::spread;

    #[test]
    fn spread_of_banks() {
        assert_eq!(spread(&[3700i32, 3750, 3650, 3720]), Some(100));
        assert_eq!(spread(&[2.5f32, 4.0, 3.0]), Some(1.5));
        assert_eq!(spread(&[12i32]), Some(0));
        assert_eq!(spread::<i32>(&[]), None);
    }
}
