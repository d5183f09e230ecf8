use dynamic_connectivity::{DynamicConnectivity, Variant};

const EDGES: [(usize, usize); 17] = [
    (0, 1),
    (0, 2),
    (0, 4),
    (1, 2),
    (1, 4),
    (1, 5),
    (2, 3),
    (2, 4),
    (2, 7),
    (3, 5),
    (3, 7),
    (3, 8),
    (4, 5),
    (5, 7),
    (5, 8),
    (6, 7),
    (7, 8),
];

fn rem_edge(t: &dyn DynamicConnectivity, u: usize, v: usize) {
    println!("Removing edge from {} to {}", u, v);
    t.remove_edge(u, v);
}

fn connected(t: &dyn DynamicConnectivity, u: usize, v: usize) {
    println!(
        "Are {} and {} connected? {}",
        u,
        v,
        if t.connected(u, v) { "Yes" } else { "No" }
    );
}

fn main() {
    let variant = match std::env::args().nth(1).map(|s| s.parse::<Variant>()) {
        None => Variant::Major,
        Some(Ok(v)) => v,
        Some(Err(e)) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };
    let t = variant.build(9);
    for (u, v) in EDGES {
        t.add_edge(u, v);
    }
    println!("Created the graph with 9 vertices and {} edges using {variant}", EDGES.len());
    connected(&*t, 0, 6);
    connected(&*t, 0, 3);
    rem_edge(&*t, 2, 7);
    connected(&*t, 6, 0);
    rem_edge(&*t, 5, 7);
    rem_edge(&*t, 3, 7);
    connected(&*t, 6, 0);
    connected(&*t, 6, 7);
    connected(&*t, 8, 0);
}
