use super::*;

const SAMPLE: &str = r#"<?xml version="1.0"?>
<!DOCTYPE datafile PUBLIC "-//Logiqx//DTD ROM Management Datafile//EN" "http://www.logiqx.com/Dats/datafile.dtd">
<datafile>
    <header>
        <name>Sony - PlayStation</name>
        <author>No-Intro Team</author>
        <version>1</version>
    </header>
    <game name="Alpha (USA)" region="USA" languages="en,fr" serial="ABC123">
        <description>Alpha (USA)</description>
        <rom name="Alpha (USA).bin" size="19" crc="A0F95D33" sha1="65EA0164C91DE2197956ED143099B90FF37D699E"/>
    </game>
    <game name="Beta (Europe)">
        <location>Europe</location>
        <language>es</language>
        <catalog>XYZ987</catalog>
        <rom name="Beta (Europe).bin" crc="deadbeef" version="Rev 1"/>
    </game>
</datafile>
"#;

#[test]
fn parses_normalized_entries() {
    let doc = parse_catalog(SAMPLE.as_bytes()).unwrap();
    assert_eq!(doc.name.as_deref(), Some("Sony - PlayStation"));
    assert_eq!(doc.version.as_deref(), Some("1"));
    assert_eq!(doc.source(), "no-intro");
    assert_eq!(doc.records.len(), 2);

    let alpha = &doc.records[0];
    assert_eq!(alpha.name, "Alpha (USA).bin");
    assert_eq!(alpha.crc32.as_deref(), Some("a0f95d33"));
    assert_eq!(
        alpha.sha1.as_deref(),
        Some("65ea0164c91de2197956ed143099b90ff37d699e")
    );
    assert_eq!(alpha.md5, None);
    assert_eq!(alpha.region.as_deref(), Some("USA"));
    assert_eq!(alpha.languages, vec!["en", "fr"]);
    assert_eq!(alpha.serial.as_deref(), Some("ABC123"));
    assert_eq!(alpha.revision, None);

    let beta = &doc.records[1];
    assert_eq!(beta.region.as_deref(), Some("Europe"));
    assert_eq!(beta.languages, vec!["es"]);
    assert_eq!(beta.serial.as_deref(), Some("XYZ987"));
    assert_eq!(beta.revision.as_deref(), Some("Rev 1"));
}

#[test]
fn rom_without_name_falls_back_to_game_name() {
    let xml = r#"<datafile><game name="Gamma" version="2"><rom crc="01020304"/><rom name="Gamma (Disc 2)" crc="05060708"/></game></datafile>"#;
    let doc = parse_catalog(xml.as_bytes()).unwrap();
    assert_eq!(doc.records.len(), 2);
    assert_eq!(doc.records[0].name, "Gamma");
    assert_eq!(doc.records[0].revision.as_deref(), Some("2"));
    assert_eq!(doc.records[1].name, "Gamma (Disc 2)");
    assert_eq!(doc.source(), "unknown");
}

#[test]
fn empty_catalog_is_valid() {
    let doc = parse_catalog(r#"<?xml version="1.0"?><datafile/>"#.as_bytes()).unwrap();
    assert!(doc.records.is_empty());
    let doc = parse_catalog("<datafile><header><author>Redump.org</author></header></datafile>".as_bytes()).unwrap();
    assert_eq!(doc.source(), "redump");
}

#[test]
fn wrong_root_element_is_rejected() {
    let err = parse_catalog("<softwarelist><software/></softwarelist>".as_bytes()).unwrap_err();
    assert!(matches!(err, DatError::InvalidDat(_)));
    assert!(err.is_validation());
}

#[test]
fn non_xml_is_rejected() {
    let err = parse_catalog("clrmamepro ( name \"x\" )".as_bytes()).unwrap_err();
    assert!(err.is_validation());
    assert!(parse_catalog("".as_bytes()).is_err());
}

#[test]
fn language_splitting() {
    assert_eq!(split_languages("En, Fr/De\\Es|It;Nl"), vec!["En", "Fr", "De", "Es", "It", "Nl"]);
    assert_eq!(split_languages(" ,, "), Vec::<String>::new());
}
