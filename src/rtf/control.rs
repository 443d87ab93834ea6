//! Static control-word table.
//!
//! Every control word the reader understands maps to a [`Control`] operation
//! and a set of [`ControlFlags`]. Lookup is a compile-time perfect hash.

use super::tables::FontFamily;
use crate::document::format::{
    BorderKind, BorderSide, BorderTarget, ImageFormat, MarkerStyle, TextAlignment, UnderlineKind,
    VerticalAlignment,
};
use bitflags::bitflags;
use phf::{Map, phf_map};

bitflags! {
    /// Properties of a control word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlFlags: u8 {
        /// Introduces a destination; valid after `\*`
        const DESTINATION = 0x01;
        /// On/off property: no parameter or non-zero means on
        const TOGGLE = 0x02;
        /// Parameter carries a value
        const VALUE = 0x04;
        /// Produces a character of text
        const SYMBOL = 0x08;
    }
}

/// Semantic operation of a control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    // Document
    Rtf,
    Ansi,
    Mac,
    Pc,
    Pca,
    AnsiCodePage,
    DefaultFont,
    UnicodeSkip,
    Unicode,
    Upr,
    Ud,
    Bin,

    // Destinations
    FontTable,
    ColorTable,
    ListTable,
    List,
    ListLevel,
    ListOverrideTable,
    ListOverride,
    ListOverrideLevel,
    ListText,
    Pn,
    Field,
    FieldInstruction,
    FieldResult,
    Picture,
    Shape,
    ShapeInstruction,
    ShapeText,
    ShapePicture,
    NonShapePicture,
    Object,
    ObjectResult,
    NestTableProps,
    NoNestTables,
    IgnoredDestination,

    // Font table entries
    Font,
    FontCharset,
    FontCodePage,
    FontFamily(FontFamily),

    // Color table entries
    Red,
    Green,
    Blue,

    // Character
    Plain,
    Bold,
    Italic,
    Underline(UnderlineKind),
    UnderlineNone,
    Strike,
    StrikeDouble,
    Super,
    Sub,
    NoSuperSub,
    Up,
    Down,
    ForeColor,
    BackColor,
    FontSize,
    Hidden,
    Engrave,
    Outline,
    Shadow,
    Lang,
    LangFe,
    RtlChar,
    LtrChar,
    CharScale,

    // Paragraph
    Par,
    Pard,
    Align(TextAlignment),
    LeftIndent,
    RightIndent,
    FirstIndent,
    SpaceBefore,
    SpaceAfter,
    LineSpacing,
    LineMultiple,
    RtlPar,
    LtrPar,
    Border(BorderTarget),
    BorderStyle(BorderKind),
    BorderWidth,
    BorderColor,
    ParaShading,
    Line,
    Page,
    Sect,
    Sectd,
    Symbol(char),

    // Lists
    ListIndex,
    ListLevelIndex,
    ListId,
    LevelNfc,
    LevelStartAt,
    ListOverrideStartAt,
    ListOverrideFormat,
    PnLevel,
    PnLevelBullet,
    PnLevelBody,
    PnLevelCont,
    PnFormat(MarkerStyle),
    PnStart,

    // Tables
    RowDefaults,
    Row,
    Cell,
    NestCell,
    NestRow,
    CellX,
    InTable,
    Itap,
    RowLeft,
    RowGap,
    RowHeight,
    RowPadding(BorderSide),
    CellPadding(BorderSide),
    CellShading,
    CellVMergeFirst,
    CellVMerge,
    CellHMergeFirst,
    CellHMerge,
    CellVAlign(VerticalAlignment),
    RtlRow,
    LtrRow,

    // Pictures
    PicWidth,
    PicHeight,
    PicGoalWidth,
    PicGoalHeight,
    PicScaleX,
    PicScaleY,
    PicFormat(ImageFormat),
}

/// Table entry for one control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlWordInfo {
    pub control: Control,
    pub flags: ControlFlags,
}

impl ControlWordInfo {
    #[inline]
    pub fn is_destination(&self) -> bool {
        self.flags.contains(ControlFlags::DESTINATION)
    }
}

const fn dest(control: Control) -> ControlWordInfo {
    ControlWordInfo {
        control,
        flags: ControlFlags::DESTINATION,
    }
}

const fn toggle(control: Control) -> ControlWordInfo {
    ControlWordInfo {
        control,
        flags: ControlFlags::TOGGLE,
    }
}

const fn value(control: Control) -> ControlWordInfo {
    ControlWordInfo {
        control,
        flags: ControlFlags::VALUE,
    }
}

const fn flag(control: Control) -> ControlWordInfo {
    ControlWordInfo {
        control,
        flags: ControlFlags::empty(),
    }
}

const fn symbol(ch: char) -> ControlWordInfo {
    ControlWordInfo {
        control: Control::Symbol(ch),
        flags: ControlFlags::SYMBOL,
    }
}

const IGNORED: ControlWordInfo = dest(Control::IgnoredDestination);

static CONTROL_WORDS: Map<&'static str, ControlWordInfo> = phf_map! {
    // Document
    "rtf" => value(Control::Rtf),
    "ansi" => flag(Control::Ansi),
    "mac" => flag(Control::Mac),
    "pc" => flag(Control::Pc),
    "pca" => flag(Control::Pca),
    "ansicpg" => value(Control::AnsiCodePage),
    "deff" => value(Control::DefaultFont),
    "uc" => value(Control::UnicodeSkip),
    "u" => value(Control::Unicode),
    "upr" => dest(Control::Upr),
    "ud" => dest(Control::Ud),
    "bin" => value(Control::Bin),

    // Header destinations
    "fonttbl" => dest(Control::FontTable),
    "colortbl" => dest(Control::ColorTable),
    "listtable" => dest(Control::ListTable),
    "list" => dest(Control::List),
    "listlevel" => dest(Control::ListLevel),
    "listoverridetable" => dest(Control::ListOverrideTable),
    "listoverride" => dest(Control::ListOverride),
    "lfolevel" => dest(Control::ListOverrideLevel),
    "listtext" => dest(Control::ListText),
    "pntext" => dest(Control::ListText),
    "pn" => dest(Control::Pn),

    // Content destinations
    "field" => dest(Control::Field),
    "fldinst" => dest(Control::FieldInstruction),
    "fldrslt" => dest(Control::FieldResult),
    "pict" => dest(Control::Picture),
    "shp" => dest(Control::Shape),
    "shpinst" => dest(Control::ShapeInstruction),
    "shptxt" => dest(Control::ShapeText),
    "shppict" => dest(Control::ShapePicture),
    "nonshppict" => dest(Control::NonShapePicture),
    "object" => dest(Control::Object),
    "result" => dest(Control::ObjectResult),
    "nesttableprops" => dest(Control::NestTableProps),
    "nonesttables" => dest(Control::NoNestTables),

    // Destinations whose content is discarded
    "stylesheet" => IGNORED,
    "info" => IGNORED,
    "header" => IGNORED,
    "headerl" => IGNORED,
    "headerr" => IGNORED,
    "headerf" => IGNORED,
    "footer" => IGNORED,
    "footerl" => IGNORED,
    "footerr" => IGNORED,
    "footerf" => IGNORED,
    "footnote" => IGNORED,
    "annotation" => IGNORED,
    "atnid" => IGNORED,
    "atnauthor" => IGNORED,
    "bkmkstart" => IGNORED,
    "bkmkend" => IGNORED,
    "xe" => IGNORED,
    "tc" => IGNORED,
    "txe" => IGNORED,
    "rxe" => IGNORED,
    "generator" => IGNORED,
    "xmlnstbl" => IGNORED,
    "rsidtbl" => IGNORED,
    "themedata" => IGNORED,
    "colorschememapping" => IGNORED,
    "latentstyles" => IGNORED,
    "datastore" => IGNORED,
    "mmathPr" => IGNORED,
    "pgdsctbl" => IGNORED,
    "listname" => IGNORED,
    "leveltext" => IGNORED,
    "levelnumbers" => IGNORED,
    "listpicture" => IGNORED,
    "pntxta" => IGNORED,
    "pntxtb" => IGNORED,
    "panose" => IGNORED,
    "falt" => IGNORED,
    "fname" => IGNORED,
    "objdata" => IGNORED,
    "objclass" => IGNORED,
    "blipuid" => IGNORED,
    "shprslt" => IGNORED,
    "sp" => IGNORED,
    "userprops" => IGNORED,
    "wgrffmtfilter" => IGNORED,
    "fchars" => IGNORED,
    "lchars" => IGNORED,
    "template" => IGNORED,
    "revtbl" => IGNORED,
    "ftnsep" => IGNORED,
    "ftnsepc" => IGNORED,
    "ftncn" => IGNORED,
    "aftnsep" => IGNORED,
    "aftnsepc" => IGNORED,
    "aftncn" => IGNORED,
    "formfield" => IGNORED,
    "docvar" => IGNORED,

    // Font table
    "f" => value(Control::Font),
    "fcharset" => value(Control::FontCharset),
    "cpg" => value(Control::FontCodePage),
    "fnil" => flag(Control::FontFamily(FontFamily::Nil)),
    "froman" => flag(Control::FontFamily(FontFamily::Roman)),
    "fswiss" => flag(Control::FontFamily(FontFamily::Swiss)),
    "fmodern" => flag(Control::FontFamily(FontFamily::Modern)),
    "fscript" => flag(Control::FontFamily(FontFamily::Script)),
    "fdecor" => flag(Control::FontFamily(FontFamily::Decor)),
    "ftech" => flag(Control::FontFamily(FontFamily::Tech)),
    "fbidi" => flag(Control::FontFamily(FontFamily::Nil)),

    // Color table
    "red" => value(Control::Red),
    "green" => value(Control::Green),
    "blue" => value(Control::Blue),

    // Character
    "plain" => flag(Control::Plain),
    "b" => toggle(Control::Bold),
    "i" => toggle(Control::Italic),
    "ul" => toggle(Control::Underline(UnderlineKind::Single)),
    "uld" => toggle(Control::Underline(UnderlineKind::Dotted)),
    "uldash" => toggle(Control::Underline(UnderlineKind::Dash)),
    "uldb" => toggle(Control::Underline(UnderlineKind::Double)),
    "ulwave" => toggle(Control::Underline(UnderlineKind::Wave)),
    "ulw" => toggle(Control::Underline(UnderlineKind::Word)),
    "ulth" => toggle(Control::Underline(UnderlineKind::Single)),
    "ulnone" => flag(Control::UnderlineNone),
    "strike" => toggle(Control::Strike),
    "striked" => toggle(Control::StrikeDouble),
    "super" => flag(Control::Super),
    "sub" => flag(Control::Sub),
    "nosupersub" => flag(Control::NoSuperSub),
    "up" => value(Control::Up),
    "dn" => value(Control::Down),
    "cf" => value(Control::ForeColor),
    "cb" => value(Control::BackColor),
    "highlight" => value(Control::BackColor),
    "chcbpat" => value(Control::BackColor),
    "fs" => value(Control::FontSize),
    "v" => toggle(Control::Hidden),
    "impr" => toggle(Control::Engrave),
    "outl" => toggle(Control::Outline),
    "shad" => toggle(Control::Shadow),
    "lang" => value(Control::Lang),
    "langfe" => value(Control::LangFe),
    "rtlch" => flag(Control::RtlChar),
    "ltrch" => flag(Control::LtrChar),
    "charscalex" => value(Control::CharScale),

    // Paragraph
    "par" => flag(Control::Par),
    "pard" => flag(Control::Pard),
    "ql" => flag(Control::Align(TextAlignment::Left)),
    "qr" => flag(Control::Align(TextAlignment::Right)),
    "qc" => flag(Control::Align(TextAlignment::Center)),
    "qj" => flag(Control::Align(TextAlignment::Justify)),
    "li" => value(Control::LeftIndent),
    "lin" => value(Control::LeftIndent),
    "ri" => value(Control::RightIndent),
    "rin" => value(Control::RightIndent),
    "fi" => value(Control::FirstIndent),
    "sb" => value(Control::SpaceBefore),
    "sa" => value(Control::SpaceAfter),
    "sl" => value(Control::LineSpacing),
    "slmult" => toggle(Control::LineMultiple),
    "rtlpar" => flag(Control::RtlPar),
    "ltrpar" => flag(Control::LtrPar),
    "brdrt" => flag(Control::Border(BorderTarget::Paragraph(BorderSide::Top))),
    "brdrl" => flag(Control::Border(BorderTarget::Paragraph(BorderSide::Left))),
    "brdrb" => flag(Control::Border(BorderTarget::Paragraph(BorderSide::Bottom))),
    "brdrr" => flag(Control::Border(BorderTarget::Paragraph(BorderSide::Right))),
    "box" => flag(Control::Border(BorderTarget::ParagraphBox)),
    "brdrs" => flag(Control::BorderStyle(BorderKind::Single)),
    "brdrth" => flag(Control::BorderStyle(BorderKind::Thick)),
    "brdrdb" => flag(Control::BorderStyle(BorderKind::Double)),
    "brdrdot" => flag(Control::BorderStyle(BorderKind::Dotted)),
    "brdrdash" => flag(Control::BorderStyle(BorderKind::Dashed)),
    "brdrnone" => flag(Control::BorderStyle(BorderKind::None)),
    "brdrnil" => flag(Control::BorderStyle(BorderKind::None)),
    "brdrw" => value(Control::BorderWidth),
    "brdrcf" => value(Control::BorderColor),
    "cbpat" => value(Control::ParaShading),
    "line" => flag(Control::Line),
    "page" => flag(Control::Page),
    "sect" => flag(Control::Sect),
    "sectd" => flag(Control::Sectd),
    "tab" => symbol('\t'),
    "emdash" => symbol('\u{2014}'),
    "endash" => symbol('\u{2013}'),
    "emspace" => symbol('\u{2003}'),
    "enspace" => symbol('\u{2002}'),
    "qmspace" => symbol('\u{2005}'),
    "bullet" => symbol('\u{2022}'),
    "lquote" => symbol('\u{2018}'),
    "rquote" => symbol('\u{2019}'),
    "ldblquote" => symbol('\u{201C}'),
    "rdblquote" => symbol('\u{201D}'),
    "zwj" => symbol('\u{200D}'),
    "zwnj" => symbol('\u{200C}'),
    "ltrmark" => symbol('\u{200E}'),
    "rtlmark" => symbol('\u{200F}'),

    // Lists
    "ls" => value(Control::ListIndex),
    "ilvl" => value(Control::ListLevelIndex),
    "listid" => value(Control::ListId),
    "levelnfc" => value(Control::LevelNfc),
    "levelnfcn" => value(Control::LevelNfc),
    "levelstartat" => value(Control::LevelStartAt),
    "listoverridestartat" => flag(Control::ListOverrideStartAt),
    "listoverrideformat" => flag(Control::ListOverrideFormat),
    "pnlvl" => value(Control::PnLevel),
    "pnlvlblt" => flag(Control::PnLevelBullet),
    "pnlvlbody" => flag(Control::PnLevelBody),
    "pnlvlcont" => flag(Control::PnLevelCont),
    "pndec" => flag(Control::PnFormat(MarkerStyle::Decimal)),
    "pnucltr" => flag(Control::PnFormat(MarkerStyle::UpperLatin)),
    "pnlcltr" => flag(Control::PnFormat(MarkerStyle::LowerLatin)),
    "pnucrm" => flag(Control::PnFormat(MarkerStyle::UpperRoman)),
    "pnlcrm" => flag(Control::PnFormat(MarkerStyle::LowerRoman)),
    "pnstart" => value(Control::PnStart),

    // Tables
    "trowd" => flag(Control::RowDefaults),
    "row" => flag(Control::Row),
    "cell" => flag(Control::Cell),
    "nestcell" => flag(Control::NestCell),
    "nestrow" => flag(Control::NestRow),
    "cellx" => value(Control::CellX),
    "intbl" => flag(Control::InTable),
    "itap" => value(Control::Itap),
    "trleft" => value(Control::RowLeft),
    "trgaph" => value(Control::RowGap),
    "trrh" => value(Control::RowHeight),
    "trpaddl" => value(Control::RowPadding(BorderSide::Left)),
    "trpaddt" => value(Control::RowPadding(BorderSide::Top)),
    "trpaddr" => value(Control::RowPadding(BorderSide::Right)),
    "trpaddb" => value(Control::RowPadding(BorderSide::Bottom)),
    "trbrdrt" => flag(Control::Border(BorderTarget::Row(BorderSide::Top))),
    "trbrdrl" => flag(Control::Border(BorderTarget::Row(BorderSide::Left))),
    "trbrdrb" => flag(Control::Border(BorderTarget::Row(BorderSide::Bottom))),
    "trbrdrr" => flag(Control::Border(BorderTarget::Row(BorderSide::Right))),
    "clbrdrt" => flag(Control::Border(BorderTarget::Cell(BorderSide::Top))),
    "clbrdrl" => flag(Control::Border(BorderTarget::Cell(BorderSide::Left))),
    "clbrdrb" => flag(Control::Border(BorderTarget::Cell(BorderSide::Bottom))),
    "clbrdrr" => flag(Control::Border(BorderTarget::Cell(BorderSide::Right))),
    "clpadl" => value(Control::CellPadding(BorderSide::Left)),
    "clpadt" => value(Control::CellPadding(BorderSide::Top)),
    "clpadr" => value(Control::CellPadding(BorderSide::Right)),
    "clpadb" => value(Control::CellPadding(BorderSide::Bottom)),
    "clcbpat" => value(Control::CellShading),
    "clvmgf" => flag(Control::CellVMergeFirst),
    "clvmrg" => flag(Control::CellVMerge),
    "clmgf" => flag(Control::CellHMergeFirst),
    "clmrg" => flag(Control::CellHMerge),
    "clvertalt" => flag(Control::CellVAlign(VerticalAlignment::Top)),
    "clvertalc" => flag(Control::CellVAlign(VerticalAlignment::Center)),
    "clvertalb" => flag(Control::CellVAlign(VerticalAlignment::Bottom)),
    "rtlrow" => flag(Control::RtlRow),
    "ltrrow" => flag(Control::LtrRow),

    // Pictures
    "picw" => value(Control::PicWidth),
    "pich" => value(Control::PicHeight),
    "picwgoal" => value(Control::PicGoalWidth),
    "pichgoal" => value(Control::PicGoalHeight),
    "picscalex" => value(Control::PicScaleX),
    "picscaley" => value(Control::PicScaleY),
    "pngblip" => flag(Control::PicFormat(ImageFormat::Png)),
    "jpegblip" => flag(Control::PicFormat(ImageFormat::Jpeg)),
    "wmetafile" => flag(Control::PicFormat(ImageFormat::Wmf)),
    "emfblip" => flag(Control::PicFormat(ImageFormat::Emf)),
    "dibitmap" => flag(Control::PicFormat(ImageFormat::Bmp)),
    "wbitmap" => flag(Control::PicFormat(ImageFormat::Bmp)),
    "macpict" => flag(Control::PicFormat(ImageFormat::Macpict)),
    "pmmetafile" => flag(Control::PicFormat(ImageFormat::Unknown)),
};

/// Look up a control word.
#[inline]
pub fn lookup(word: &str) -> Option<&'static ControlWordInfo> {
    CONTROL_WORDS.get(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let info = lookup("b").unwrap();
        assert_eq!(info.control, Control::Bold);
        assert!(info.flags.contains(ControlFlags::TOGGLE));
        assert!(lookup("fldinst").unwrap().is_destination());
        assert!(lookup("bkmkstart").unwrap().is_destination());
        assert_eq!(lookup("bkmkstart").unwrap().control, Control::IgnoredDestination);
        assert!(lookup("nosuchword").is_none());
    }

    #[test]
    fn test_symbols() {
        assert_eq!(lookup("emdash").unwrap().control, Control::Symbol('\u{2014}'));
        assert_eq!(lookup("tab").unwrap().flags, ControlFlags::SYMBOL);
    }
}
