use super::{with_cleanup, Failure, Finding};
use crate::host::{Host, HostResult, ProbeWidths};

/// Candidate families, probed in this order.
pub const CANDIDATES: [&str; 231] = [
    "Abadi MT Condensed Light",
    "Adobe Fangsong Std",
    "Adobe Hebrew",
    "Adobe Ming Std",
    "Agency FB",
    "Aharoni",
    "Andalus",
    "Angsana New",
    "AngsanaUPC",
    "Aparajita",
    "Arab",
    "Arabic Transparent",
    "Arabic Typesetting",
    "Arial Baltic",
    "Arial Black",
    "Arial CE",
    "Arial CYR",
    "Arial Greek",
    "Arial TUR",
    "Arial",
    "Batang",
    "BatangChe",
    "Bauhaus 93",
    "Bell MT",
    "Bitstream Vera Serif",
    "Bodoni MT",
    "Bookman Old Style",
    "Braggadocio",
    "Broadway",
    "Browallia New",
    "BrowalliaUPC",
    "Calibri Light",
    "Calibri",
    "Californian FB",
    "Cambria Math",
    "Cambria",
    "Candara",
    "Castellar",
    "Casual",
    "Centaur",
    "Century Gothic",
    "Chalkduster",
    "Colonna MT",
    "Comic Sans MS",
    "Consolas",
    "Constantia",
    "Copperplate Gothic Light",
    "Corbel",
    "Cordia New",
    "CordiaUPC",
    "Courier New Baltic",
    "Courier New CE",
    "Courier New CYR",
    "Courier New Greek",
    "Courier New TUR",
    "Courier New",
    "DFKai-SB",
    "DaunPenh",
    "David",
    "DejaVu LGC Sans Mono",
    "Desdemona",
    "DilleniaUPC",
    "DokChampa",
    "Dotum",
    "DotumChe",
    "Ebrima",
    "Engravers MT",
    "Eras Bold ITC",
    "Estrangelo Edessa",
    "EucrosiaUPC",
    "Euphemia",
    "Eurostile",
    "FangSong",
    "Forte",
    "FrankRuehl",
    "Franklin Gothic Heavy",
    "Franklin Gothic Medium",
    "FreesiaUPC",
    "French Script MT",
    "Gabriola",
    "Gautami",
    "Georgia",
    "Gigi",
    "Gisha",
    "Goudy Old Style",
    "Gulim",
    "GulimChe",
    "GungSeo",
    "Gungsuh",
    "GungsuhChe",
    "Haettenschweiler",
    "Harrington",
    "Hei S",
    "HeiT",
    "Heisei Kaku Gothic",
    "Hiragino Sans GB",
    "Impact",
    "Informal Roman",
    "IrisUPC",
    "Iskoola Pota",
    "JasmineUPC",
    "KacstOne",
    "KaiTi",
    "Kalinga",
    "Kartika",
    "Khmer UI",
    "Kino MT",
    "KodchiangUPC",
    "Kokila",
    "Kozuka Gothic Pr6N",
    "Lao UI",
    "Latha",
    "Leelawadee",
    "Levenim MT",
    "LilyUPC",
    "Lohit Gujarati",
    "Loma",
    "Lucida Bright",
    "Lucida Console",
    "Lucida Fax",
    "Lucida Sans Unicode",
    "MS Gothic",
    "MS Mincho",
    "MS PGothic",
    "MS PMincho",
    "MS Reference Sans Serif",
    "MS UI Gothic",
    "MV Boli",
    "Magneto",
    "Malgun Gothic",
    "Mangal",
    "Marlett",
    "Matura MT Script Capitals",
    "Meiryo UI",
    "Meiryo",
    "Menlo",
    "Microsoft Himalaya",
    "Microsoft JhengHei",
    "Microsoft New Tai Lue",
    "Microsoft PhagsPa",
    "Microsoft Sans Serif",
    "Microsoft Tai Le",
    "Microsoft Uighur",
    "Microsoft YaHei",
    "Microsoft Yi Baiti",
    "MingLiU",
    "MingLiU-ExtB",
    "MingLiU_HKSCS",
    "MingLiU_HKSCS-ExtB",
    "Miriam Fixed",
    "Miriam",
    "Mongolian Baiti",
    "MoolBoran",
    "NSimSun",
    "Narkisim",
    "News Gothic MT",
    "Niagara Solid",
    "Nyala",
    "PMingLiU",
    "PMingLiU-ExtB",
    "Palace Script MT",
    "Palatino Linotype",
    "Papyrus",
    "Perpetua",
    "Plantagenet Cherokee",
    "Playbill",
    "Prelude Bold",
    "Prelude Condensed Bold",
    "Prelude Condensed Medium",
    "Prelude Medium",
    "PreludeCompressedWGL Black",
    "PreludeCompressedWGL Bold",
    "PreludeCompressedWGL Light",
    "PreludeCompressedWGL Medium",
    "PreludeCondensedWGL Black",
    "PreludeCondensedWGL Bold",
    "PreludeCondensedWGL Light",
    "PreludeCondensedWGL Medium",
    "PreludeWGL Black",
    "PreludeWGL Bold",
    "PreludeWGL Light",
    "PreludeWGL Medium",
    "Raavi",
    "Rachana",
    "Rockwell",
    "Rod",
    "Sakkal Majalla",
    "Sawasdee",
    "Script MT Bold",
    "Segoe Print",
    "Segoe Script",
    "Segoe UI Light",
    "Segoe UI Semibold",
    "Segoe UI Symbol",
    "Segoe UI",
    "Shonar Bangla",
    "Showcard Gothic",
    "Shruti",
    "SimHei",
    "SimSun",
    "SimSun-ExtB",
    "Simplified Arabic Fixed",
    "Simplified Arabic",
    "Snap ITC",
    "Sylfaen",
    "Symbol",
    "Tahoma",
    "Times New Roman Baltic",
    "Times New Roman CE",
    "Times New Roman CYR",
    "Times New Roman Greek",
    "Times New Roman TUR",
    "Times New Roman",
    "TlwgMono",
    "Traditional Arabic",
    "Trebuchet MS",
    "Tunga",
    "Tw Cen MT Condensed Extra Bold",
    "Ubuntu",
    "Umpush",
    "Univers",
    "Utopia",
    "Utsaah",
    "Vani",
    "Verdana",
    "Vijaya",
    "Vladimir Script",
    "Vrinda",
    "Webdings",
    "Wide Latin",
    "Wingdings",
];

/// Drops characters that would break out of the probe markup.
pub fn sanitize(family: &str) -> String {
    family
        .chars()
        .filter(|c| !matches!(*c, '\'' | '"' | '<' | '>'))
        .collect()
}

pub async fn collect(host: &dyn Host) -> Finding {
    let families: Vec<String> = CANDIDATES.iter().map(|f| sanitize(f)).collect();

    let batch = match host.mount_font_probes(&families).await {
        Ok(batch) => batch,
        Err(e) => {
            tracing::debug!("font probes could not be mounted: {}", e);
            return Finding::Failed(Failure::Token("Error"));
        }
    };

    let measured = with_cleanup(host.measure_font_probes(batch), async {
        if let Err(e) = host.unmount_font_probes(batch).await {
            tracing::debug!("font probe cleanup failed: {}", e);
        }
    })
    .await;

    match measured.and_then(select) {
        Ok(fonts) => Finding::Value(fonts.join(" | ")),
        Err(e) => {
            tracing::debug!("font measurement failed: {}", e);
            Finding::Failed(Failure::Token("Error"))
        }
    }
}

/// Candidates whose two probes measured the same width.
fn select(widths: Vec<ProbeWidths>) -> HostResult<Vec<&'static str>> {
    if widths.len() != CANDIDATES.len() {
        return Err(crate::host::HostError::Script(format!(
            "expected {} probe widths, got {}",
            CANDIDATES.len(),
            widths.len()
        )));
    }

    Ok(CANDIDATES
        .iter()
        .zip(widths)
        .filter(|(_, w)| w.sans == w.mono)
        .map(|(name, _)| *name)
        .collect())
}
