use curtain_core::nearby::{PlotPoint, distance, find_nearby, find_nearby_at};

fn points() -> Vec<PlotPoint> {
    vec![
        PlotPoint::new("center", 0.0, 0.0),
        PlotPoint::new("far", 5.0, 5.0),
        PlotPoint::new("b", 0.0, 0.5),
        PlotPoint::new("a", 0.3, 0.0),
        PlotPoint::new("tie", -0.5, 0.0),
        PlotPoint::new("edge", 1.0, 0.0),
    ]
}

#[test]
fn sorted_by_distance_without_center() {
    let all = points();
    let found = find_nearby(&all[0], &all, 1.0);
    let ids = found.iter().map(|n| n.point.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["a", "b", "tie", "edge"]);
    assert!(found.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert_eq!(found.last().unwrap().distance, 1.0);
}

#[test]
fn ties_keep_input_order() {
    let all = vec![
        PlotPoint::new("c", 0.0, 0.0),
        PlotPoint::new("right", 0.5, 0.0),
        PlotPoint::new("up", 0.0, 0.5),
        PlotPoint::new("left", -0.5, 0.0),
    ];
    let found = find_nearby(&all[0], &all, 1.0);
    let ids = found.iter().map(|n| n.point.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["right", "up", "left"]);
}

#[test]
fn tap_position_includes_every_point() {
    let all = points();
    let found = find_nearby_at(0.0, 0.0, &all, 0.4);
    let ids = found.iter().map(|n| n.point.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["center", "a"]);
}

#[test]
fn zero_cutoff_and_empty_input() {
    let all = points();
    assert!(find_nearby(&all[0], &all, 0.0).is_empty());
    assert!(find_nearby(&all[0], &[], 10.0).is_empty());
    assert_eq!(distance(&PlotPoint::new("p", 0.0, 0.0), &PlotPoint::new("q", 3.0, 4.0)), 5.0);
}

#[test]
fn coincident_point_is_kept_at_zero_distance() {
    let all = vec![
        PlotPoint::new("center", 1.5, 2.0),
        PlotPoint::new("twin", 1.5, 2.0),
        PlotPoint::new("near", 1.5, 2.5),
    ];
    let found = find_nearby(&all[0], &all, 1.0);
    let ids = found.iter().map(|n| n.point.id.as_str()).collect::<Vec<_>>();
    assert_eq!(ids, vec!["twin", "near"]);
    assert_eq!(found[0].distance, 0.0);

    let at_zero = find_nearby(&all[0], &all, 0.0);
    assert_eq!(at_zero.len(), 1);
    assert_eq!(at_zero[0].point.id, "twin");
}
