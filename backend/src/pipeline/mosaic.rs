//! Composite filter graph for mosaic channels.

use camtuner_types::{MAX_MOSAIC_SOURCES, MIN_MOSAIC_SOURCES};

use super::spec::{FilterChain, FilterGraph};

pub const TILE_WIDTH: u32 = 640;
pub const TILE_HEIGHT: u32 = 360;

/// Label of the composited video pad.
pub const VIDEO_OUT: &str = "vout";

/// Tile positions (`x_y`) on the 2x2 canvas, filled row-major.
fn tile_origin(index: usize) -> String {
    let x = (index as u32 % 2) * TILE_WIDTH;
    let y = (index as u32 / 2) * TILE_HEIGHT;
    format!("{}_{}", x, y)
}

/// `xstack` layout string for `tiles` inputs.
///
/// Two tiles sit side by side on the top row, a third goes bottom-left and a
/// fourth completes the 2x2 grid.
pub fn layout(tiles: usize) -> String {
    (0..tiles)
        .map(tile_origin)
        .collect::<Vec<_>>()
        .join("|")
}

/// Scale and letterbox one input to a tile, keeping its aspect ratio.
fn tile_chain(input: usize) -> FilterChain {
    FilterChain {
        inputs: vec![format!("{}:v", input)],
        filters: vec![
            format!(
                "scale={w}:{h}:force_original_aspect_ratio=decrease",
                w = TILE_WIDTH,
                h = TILE_HEIGHT
            ),
            format!(
                "pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black",
                w = TILE_WIDTH,
                h = TILE_HEIGHT
            ),
            "setsar=1".to_string(),
        ],
        output: format!("v{}", input),
    }
}

/// Build the composite graph for `inputs` sources.
///
/// Returns `None` outside the 2-4 range; a composite of one input is never
/// produced.
pub fn composite_graph(inputs: usize) -> Option<FilterGraph> {
    if !(MIN_MOSAIC_SOURCES..=MAX_MOSAIC_SOURCES).contains(&inputs) {
        return None;
    }

    let mut chains: Vec<FilterChain> = (0..inputs).map(tile_chain).collect();
    chains.push(FilterChain {
        inputs: (0..inputs).map(|i| format!("v{}", i)).collect(),
        filters: vec![format!(
            "xstack=inputs={}:layout={}:fill=black",
            inputs,
            layout(inputs)
        )],
        output: VIDEO_OUT.to_string(),
    });

    Some(FilterGraph {
        chains,
        video_out: VIDEO_OUT.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts() {
        assert_eq!(layout(2), "0_0|640_0");
        assert_eq!(layout(3), "0_0|640_0|0_360");
        assert_eq!(layout(4), "0_0|640_0|0_360|640_360");
    }

    #[test]
    fn test_two_tile_graph() {
        let graph = composite_graph(2).unwrap();
        assert_eq!(
            graph.to_string(),
            "[0:v]scale=640:360:force_original_aspect_ratio=decrease,\
             pad=640:360:(ow-iw)/2:(oh-ih)/2:black,setsar=1[v0];\
             [1:v]scale=640:360:force_original_aspect_ratio=decrease,\
             pad=640:360:(ow-iw)/2:(oh-ih)/2:black,setsar=1[v1];\
             [v0][v1]xstack=inputs=2:layout=0_0|640_0:fill=black[vout]"
        );
        assert_eq!(graph.video_out, "vout");
    }

    #[test]
    fn test_tile_count_matches_inputs() {
        for n in 2..=4 {
            let graph = composite_graph(n).unwrap();
            assert_eq!(graph.chains.len(), n + 1);
            assert_eq!(graph.chains[n].inputs.len(), n);
        }
    }

    #[test]
    fn test_out_of_range_has_no_graph() {
        assert!(composite_graph(0).is_none());
        assert!(composite_graph(1).is_none());
        assert!(composite_graph(5).is_none());
    }
}
