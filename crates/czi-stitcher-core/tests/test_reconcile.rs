#[allow(dead_code)]
mod common;

use czi_stitcher_core::ome::{
    attach_experimenter, collapse_filter_sets, retain_single_image, CollapseSummary,
    ExperimenterIdentity, MetadataTransform, OmeMetadata,
};

fn sample_metadata() -> OmeMetadata {
    OmeMetadata::parse(&common::acquisition_xml(16)).unwrap()
}

fn identity() -> ExperimenterIdentity {
    ExperimenterIdentity {
        email: "ada@example.org".into(),
        first_name: "Ada".into(),
        last_name: "Lovelace".into(),
        institution: "Analytical Engines Ltd".into(),
    }
}

// ---------------------------------------------------------------------------
// collapse_filter_sets
// ---------------------------------------------------------------------------

#[test]
fn test_collapse_leaves_one_filter_set() {
    let mut metadata = sample_metadata();
    assert_eq!(metadata.filter_set_count(), 3);

    let summary = collapse_filter_sets(&mut metadata);

    assert_eq!(
        summary,
        CollapseSummary {
            filter_sets_removed: 2,
            dichroics_removed: 2,
            filters_removed: 4,
        }
    );
    assert_eq!(metadata.filter_set_count(), 1);
    assert_eq!(metadata.dichroic_count(), 1);
    assert_eq!(metadata.filter_count(), 2);
    for image in 0..metadata.image_count() {
        let links = metadata.channel_filter_sets(image);
        assert_eq!(links, vec![Some("FilterSet:0".to_string()); 3]);
    }
    assert!(metadata.find_filter_set("FilterSet:0").is_some());
}

#[test]
fn test_collapse_is_idempotent() {
    let mut metadata = sample_metadata();
    collapse_filter_sets(&mut metadata);
    let once = metadata.clone();

    let summary = collapse_filter_sets(&mut metadata);
    assert_eq!(summary, CollapseSummary::default());
    assert_eq!(metadata, once);
}

#[test]
fn test_collapse_keeps_components_still_referenced() {
    let xml = r#"<OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06">
        <Instrument ID="Instrument:0">
            <Dichroic ID="Dichroic:0"/>
            <Dichroic ID="Dichroic:1"/>
            <Filter ID="Filter:0"/>
            <Filter ID="Filter:1"/>
            <FilterSet ID="FilterSet:0"><DichroicRef ID="Dichroic:0"/><EmissionFilterRef ID="Filter:0"/></FilterSet>
            <FilterSet ID="FilterSet:1"><DichroicRef ID="Dichroic:1"/><EmissionFilterRef ID="Filter:1"/></FilterSet>
        </Instrument>
        <Image ID="Image:0">
            <Pixels ID="Pixels:0" DimensionOrder="XYCZT" Type="uint8" SizeX="4" SizeY="4" SizeZ="1" SizeC="2" SizeT="1">
                <Channel ID="Channel:0:0"><FilterSetRef ID="FilterSet:0"/></Channel>
                <Channel ID="Channel:0:1"><FilterSetRef ID="FilterSet:1"/><LightPath><EmissionFilterRef ID="Filter:1"/></LightPath></Channel>
            </Pixels>
        </Image>
    </OME>"#;
    let mut metadata = OmeMetadata::parse(xml).unwrap();

    let summary = collapse_filter_sets(&mut metadata);

    assert_eq!(summary.filter_sets_removed, 1);
    assert_eq!(summary.dichroics_removed, 1);
    assert_eq!(summary.filters_removed, 0);
    assert_eq!(metadata.filter_count(), 2);
}

#[test]
fn test_collapse_links_channels_without_filter_set() {
    let xml = r#"<OME>
        <Instrument ID="Instrument:0"><FilterSet ID="FilterSet:0"/></Instrument>
        <Image ID="Image:0">
            <Pixels ID="Pixels:0" DimensionOrder="XYCZT" Type="uint8" SizeX="4" SizeY="4" SizeZ="1" SizeC="2" SizeT="1">
                <Channel ID="Channel:0:0"><FilterSetRef ID="FilterSet:0"/></Channel>
                <Channel ID="Channel:0:1"><LightPath/></Channel>
            </Pixels>
        </Image>
    </OME>"#;
    let mut metadata = OmeMetadata::parse(xml).unwrap();

    collapse_filter_sets(&mut metadata);

    assert_eq!(
        metadata.channel_filter_sets(0),
        vec![Some("FilterSet:0".to_string()), Some("FilterSet:0".to_string())]
    );
    let xml = metadata.to_xml().unwrap();
    let ref_pos = xml.rfind("<FilterSetRef").unwrap();
    let light_pos = xml.find("<LightPath").unwrap();
    assert!(ref_pos < light_pos);
}

#[test]
fn test_collapse_without_filter_sets_is_noop() {
    let mut metadata = OmeMetadata::single_image(
        "plain.tif",
        8,
        8,
        2,
        czi_stitcher_core::io::PixelType::Uint8,
    );
    let before = metadata.clone();
    assert_eq!(collapse_filter_sets(&mut metadata), CollapseSummary::default());
    assert_eq!(metadata, before);
}

// ---------------------------------------------------------------------------
// attach_experimenter
// ---------------------------------------------------------------------------

#[test]
fn test_attach_experimenter_creates_record() {
    let mut metadata = sample_metadata();
    assert_eq!(metadata.experimenter_count(), 0);

    attach_experimenter(&mut metadata, &identity(), 0);

    assert_eq!(metadata.experimenter_count(), 1);
    let record = metadata.experimenter(0).unwrap();
    assert_eq!(record.attr("ID"), Some("Experimenter:0"));
    assert_eq!(record.attr("Email"), Some("ada@example.org"));
    assert_eq!(record.attr("FirstName"), Some("Ada"));
    assert_eq!(record.attr("LastName"), Some("Lovelace"));
    assert_eq!(record.attr("Institution"), Some("Analytical Engines Ltd"));

    // Schema order: Experimenter precedes Instrument and Image.
    let xml = metadata.to_xml().unwrap();
    assert!(xml.find("<Experimenter").unwrap() < xml.find("<Instrument").unwrap());
}

#[test]
fn test_attach_experimenter_overwrites() {
    let mut metadata = sample_metadata();
    attach_experimenter(&mut metadata, &identity(), 0);

    let replacement = ExperimenterIdentity {
        email: "grace@example.org".into(),
        first_name: "Grace".into(),
        last_name: "Hopper".into(),
        institution: String::new(),
    };
    attach_experimenter(&mut metadata, &replacement, 0);

    assert_eq!(metadata.experimenter_count(), 1);
    let record = metadata.experimenter(0).unwrap();
    assert_eq!(record.attr("FirstName"), Some("Grace"));
    assert_eq!(record.attr("Institution"), None);
}

#[test]
fn test_attach_experimenter_at_index_fills_lower_records() {
    let mut metadata = sample_metadata();
    attach_experimenter(&mut metadata, &identity(), 2);

    assert_eq!(metadata.experimenter_count(), 3);
    assert_eq!(metadata.experimenter(0).unwrap().attr("Email"), None);
    assert_eq!(metadata.experimenter(2).unwrap().attr("ID"), Some("Experimenter:2"));
    assert_eq!(metadata.experimenter(2).unwrap().attr("Email"), Some("ada@example.org"));
}

// ---------------------------------------------------------------------------
// retain_single_image and transforms
// ---------------------------------------------------------------------------

#[test]
fn test_retain_single_image() {
    let mut metadata = sample_metadata();
    assert_eq!(metadata.image_count(), 4);

    retain_single_image(&mut metadata, "sample.ome.tif", 1024, 768).unwrap();

    assert_eq!(metadata.image_count(), 1);
    assert_eq!(metadata.image_name(0), Some("sample.ome.tif"));
    let info = metadata.pixels_info(0).unwrap();
    assert_eq!((info.size_x, info.size_y), (1024, 768));
    assert_eq!(info.size_c, 3);
    assert_eq!(metadata.pixels(0).unwrap().attr("ID"), Some("Pixels:0"));
}

#[test]
fn test_transforms_apply_in_order() {
    let transforms = [
        MetadataTransform::CollapseFilterSets,
        MetadataTransform::AttachExperimenter {
            identity: identity(),
            index: 0,
        },
    ];
    let metadata = transforms
        .iter()
        .fold(sample_metadata(), |m, t| t.apply(m));

    assert_eq!(metadata.filter_set_count(), 1);
    assert_eq!(metadata.experimenter_count(), 1);
    assert_eq!(transforms[0].to_string(), "Collapse filter sets");
    assert_eq!(transforms[1].to_string(), "Attach experimenter #0");
}

#[test]
fn test_select_channels_keeps_requested_order_and_planes() {
    let xml = r#"<OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06"><Image ID="Image:0"><Pixels ID="Pixels:0" DimensionOrder="XYCZT" Type="uint16" SizeX="2" SizeY="2" SizeZ="1" SizeC="3" SizeT="1"><Channel ID="Channel:0:0" Name="DAPI" SamplesPerPixel="1"/><Channel ID="Channel:0:1" Name="GFP" SamplesPerPixel="1"/><Channel ID="Channel:0:2" Name="Cy5" SamplesPerPixel="1"/><TiffData IFD="0" PlaneCount="3"/><Plane TheZ="0" TheC="0" TheT="0"/><Plane TheZ="0" TheC="1" TheT="0"/><Plane TheZ="0" TheC="2" TheT="0"/></Pixels></Image></OME>"#;
    let mut metadata = OmeMetadata::parse(xml).unwrap();

    assert_eq!(metadata.select_channels(0, &[0, 2, 7]).unwrap(), 2);

    let pixels = metadata.pixels(0).unwrap();
    let names: Vec<&str> = pixels.children_named("Channel").filter_map(|c| c.attr("Name")).collect();
    assert_eq!(names, ["DAPI", "Cy5"]);
    let planes: Vec<&str> = pixels.children_named("Plane").filter_map(|p| p.attr("TheC")).collect();
    assert_eq!(planes, ["0", "1"]);
    let text = metadata.to_xml().unwrap();
    assert!(text.find("Cy5").unwrap() < text.find("TiffData").unwrap());
}

#[test]
fn test_metadata_xml_round_trip_keeps_unknown_elements() {
    let xml = r#"<OME xmlns="http://www.openmicroscopy.org/Schemas/OME/2016-06"><Image ID="Image:0" Name="a &amp; b"><AcquisitionDate>2024-01-01T00:00:00</AcquisitionDate><Pixels ID="Pixels:0" DimensionOrder="XYCZT" Type="uint16" SizeX="2" SizeY="2" SizeZ="1" SizeC="1" SizeT="1"/></Image><StructuredAnnotations><XMLAnnotation ID="Annotation:0"><Value><OriginalMetadata><Key>Zeiss</Key></OriginalMetadata></Value></XMLAnnotation></StructuredAnnotations></OME>"#;
    let metadata = OmeMetadata::parse(xml).unwrap();
    assert_eq!(metadata.image_name(0), Some("a & b"));

    let reparsed = OmeMetadata::parse(&metadata.to_xml().unwrap()).unwrap();
    assert_eq!(reparsed, metadata);
    let text = reparsed.to_xml().unwrap();
    assert!(text.contains("<Key>Zeiss</Key>"));
    assert!(text.contains("2024-01-01T00:00:00"));
}

#[test]
fn test_parse_rejects_non_ome_root() {
    assert!(OmeMetadata::parse("<Foo/>").is_err());
}
