/// Asserts that two floats agree within a tolerance (default 1e-9).
#[macro_export]
macro_rules! assert_close {
    ($left:expr, $right:expr) => {
        $crate::assert_close!($left, $right, 1e-9)
    };
    ($left:expr, $right:expr, $tol:expr) => {{
        let (l, r): (f64, f64) = ($left, $right);
        assert!((l - r).abs() <= $tol, "{} differs from {} by more than {}", l, r, $tol);
    }};
}

/// Asserts that the live organism count matches and agrees with cell occupancy.
#[macro_export]
macro_rules! assert_population {
    ($pop:expr, $count:expr) => {
        assert_eq!($pop.live_count(), $count, "Population count mismatch");
        assert_eq!(
            $pop.occupied_count(),
            $count,
            "Occupied cells disagree with live count"
        );
    };
}

/// Asserts that a cell holds no organism and carries no scheduling weight.
#[macro_export]
macro_rules! assert_cell_empty {
    ($pop:expr, $cell:expr) => {
        assert!(
            $pop.occupant($cell).is_none(),
            "Cell {} should be empty",
            $cell
        );
        assert_eq!(
            $pop.scheduler().weight($cell),
            0.0,
            "Empty cell {} still has weight",
            $cell
        );
    };
}
