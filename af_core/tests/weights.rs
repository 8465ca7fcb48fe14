use af_core::weights::RegionWeights;
use af_traits::Rect;
use rstest::rstest;

fn weight_at(w: &RegionWeights, row: u32, col: u32) -> u16 {
    w.w[(row * w.cols + col) as usize]
}

#[rstest]
#[case(12, 16)]
#[case(4, 4)]
#[case(3, 4)]
#[case(1, 1)]
fn central_fallback_covers_middle_half_by_third(#[case] rows: u32, #[case] cols: u32) {
    let mut weights = RegionWeights::new();
    weights.compute(rows, cols, &Rect::new(0, 0, 1920, 1080), &[]);

    let mut sum = 0u32;
    for r in 0..rows {
        for c in 0..cols {
            let inside =
                (rows / 3..rows - rows / 3).contains(&r) && (cols / 4..cols - cols / 4).contains(&c);
            assert_eq!(weight_at(&weights, r, c), u16::from(inside), "cell ({r},{c})");
            sum += u32::from(inside);
        }
    }
    assert_eq!(weights.sum, sum);
}

#[test]
fn full_region_window_weights_every_cell_equally() {
    // Single window spanning the whole statistics region, 4x4 grid: every
    // cell gets 46080 / (10 * 16) = 288, for a grid sum of 4608.
    let region = Rect::new(0, 0, 640, 480);
    let mut weights = RegionWeights::new();
    weights.compute(4, 4, &region, &[region]);

    assert!(weights.w.iter().all(|&w| w == 288));
    assert_eq!(weights.sum, 4608);
}

#[test]
fn quarter_window_touches_only_its_cells() {
    // Window over the top-left quarter of a 2x2 grid.
    let region = Rect::new(0, 0, 400, 400);
    let window = Rect::new(0, 0, 200, 200);
    let mut weights = RegionWeights::new();
    weights.compute(2, 2, &region, &[window]);

    // 46080 / (10 * 4) = 1152 for the fully covered cell.
    assert_eq!(weight_at(&weights, 0, 0), 1152);
    assert_eq!(weight_at(&weights, 0, 1), 0);
    assert_eq!(weight_at(&weights, 1, 0), 0);
    assert_eq!(weight_at(&weights, 1, 1), 0);
    assert_eq!(weights.sum, 1152);
}

#[test]
fn partial_overlap_rounds_up() {
    // Window covering half of one 100x100 cell; the contribution rounds
    // up via ceiling division.
    let region = Rect::new(0, 0, 200, 200);
    let window = Rect::new(0, 0, 50, 100);
    let mut weights = RegionWeights::new();
    weights.compute(2, 2, &region, &[window]);

    // max cell weight 46080 / (10 * 4) = 1152; half coverage -> 576.
    assert_eq!(weight_at(&weights, 0, 0), 576);
    assert_eq!(weights.sum, 576);
}

#[test]
fn window_outside_region_falls_back_to_central_window() {
    let region = Rect::new(0, 0, 640, 480);
    let window = Rect::new(10_000, 10_000, 100, 100);
    let mut weights = RegionWeights::new();
    weights.compute(4, 4, &region, &[window]);

    // Central fallback: rows 1..3 x cols 1..3, weight 1 each.
    assert_eq!(weights.sum, 4);
    assert_eq!(weight_at(&weights, 1, 1), 1);
    assert_eq!(weight_at(&weights, 0, 0), 0);
}

#[test]
fn region_smaller_than_grid_falls_back() {
    // Fewer pixels than grid cells: the window path cannot be used.
    let region = Rect::new(0, 0, 2, 2);
    let window = Rect::new(0, 0, 2, 2);
    let mut weights = RegionWeights::new();
    weights.compute(4, 4, &region, &[window]);

    assert_eq!(weights.sum, 4);
}

#[test]
fn two_windows_accumulate() {
    let region = Rect::new(0, 0, 400, 400);
    let window = Rect::new(0, 0, 200, 200);
    let mut weights = RegionWeights::new();
    weights.compute(2, 2, &region, &[window, window]);

    assert_eq!(weight_at(&weights, 0, 0), 2304);
    assert_eq!(weights.sum, 2304);
}

#[test]
fn invalidate_zeroes_the_sum_only() {
    let region = Rect::new(0, 0, 640, 480);
    let mut weights = RegionWeights::new();
    weights.compute(4, 4, &region, &[]);
    assert!(weights.sum > 0);

    weights.invalidate();
    assert_eq!(weights.sum, 0);
    assert_eq!(weights.w.len(), 16);
}
