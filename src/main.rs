use clap::Parser;
use pageforge::epub::TocDisplay;
use pageforge::layout::{DEFAULT_CONFIG_PATH, LayoutMode};
use pageforge::{
    BookContent, EpubError, ExtractorRegistry, FittedContent, FittingConfig, ParseOptions, Progress, Result,
    fit_content,
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// 📚 PageForge - EPUB解析与分页工具
#[derive(Parser)]
#[command(name = "pageforge")]
#[command(about = "解析EPUB文件并按视口尺寸分页")]
#[command(version)]
struct Args {
    /// 书籍文件路径
    #[arg(help = "要处理的书籍文件路径")]
    book_file: Option<String>,

    /// 详细输出模式
    #[arg(short, long, help = "显示详细信息和调试日志")]
    verbose: bool,

    /// 分页配置文件
    #[arg(short = 'C', long, help = "分页配置文件路径（默认读取pageforge.yaml）")]
    config: Option<String>,

    /// 视口宽度
    #[arg(long, help = "覆盖配置中的容器宽度（像素）")]
    width: Option<f32>,

    /// 视口高度
    #[arg(long, help = "覆盖配置中的容器高度（像素）")]
    height: Option<f32>,

    /// 双栏模式
    #[arg(long, help = "使用双栏布局")]
    two_column: bool,

    /// 显示目录树
    #[arg(short, long, help = "显示书籍目录树结构")]
    toc: bool,

    /// 显示每页摘要
    #[arg(short, long, help = "列出每一页的摘要")]
    pages: bool,

    /// 显示指定页内容
    #[arg(long, help = "显示指定页的内容（页码从1开始）")]
    page: Option<usize>,

    /// 页面内容显示格式
    #[arg(long, value_enum, default_value = "text", help = "页面内容的显示格式")]
    format: ContentFormat,

    /// 以YAML输出分页结果
    #[arg(long, help = "以YAML格式输出完整分页结果")]
    dump_yaml: bool,

    /// 写出默认配置文件
    #[arg(long, value_name = "PATH", help = "把默认分页配置写入指定路径后退出")]
    write_default_config: Option<String>,
}

/// 页面内容显示格式
#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ContentFormat {
    /// 原始HTML格式
    Html,
    /// 纯文本格式（移除所有HTML标签）
    Text,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    println!("📚 PageForge - EPUB解析与分页工具");

    if let Some(path) = &args.write_default_config {
        match FittingConfig::generate_default_config(path) {
            Ok(_) => println!("📝 已生成默认配置文件: {}", path),
            Err(e) => eprintln!("❌ 错误: {}", e),
        }
        return;
    }

    let Some(book_file) = args.book_file.clone() else {
        eprintln!("❌ 错误: 需要指定书籍文件路径");
        return;
    };

    if args.verbose {
        println!("🔍 详细模式已启用");
    }
    println!("正在处理文件: {}", book_file);

    match process_book(&book_file, &args) {
        Ok(_) => println!("🎉 处理完成！"),
        Err(e) => eprintln!("❌ 错误: {}", e),
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "pageforge=debug" } else { "pageforge=warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// 读取配置，命令行参数优先
fn load_config(args: &Args) -> Result<FittingConfig> {
    let mut config = match &args.config {
        Some(path) => FittingConfig::from_file(path)?,
        None => FittingConfig::load_or_default(DEFAULT_CONFIG_PATH),
    };

    if let Some(width) = args.width {
        config.container_width = width;
    }
    if let Some(height) = args.height {
        config.container_height = height;
    }
    if args.two_column {
        config.layout_mode = LayoutMode::TwoColumn;
    }
    config.validate()?;
    Ok(config)
}

fn process_book(path: &str, args: &Args) -> Result<()> {
    let config = load_config(args)?;
    let data = std::fs::read(path)?;

    let extractor = ExtractorRegistry::default().for_path(path);
    let verbose = args.verbose;
    let mut report = |progress: &Progress| {
        if verbose {
            println!("  ⏳ {:?} {}%", progress.phase, progress.percent);
        }
    };

    let book = extractor.extract_content(data, &ParseOptions::default(), Some(&mut report))?;
    display_book(&book, verbose);

    if args.toc {
        display_table_of_contents(&book);
    }

    let fitted = fit_content(&book, &config, None, Some(&mut report));
    display_fitting_summary(&fitted, &config);

    if args.pages {
        display_pages(&fitted);
    }

    if let Some(number) = args.page {
        display_page_content(&fitted, number, args.format)?;
    }

    if args.dump_yaml {
        let yaml = serde_yml::to_string(&fitted)
            .map_err(|e| EpubError::ConfigError(format!("序列化分页结果失败: {}", e)))?;
        println!("{}", yaml);
    }

    Ok(())
}

/// 显示书籍基本信息
fn display_book(book: &BookContent, verbose: bool) {
    println!("\n📊 书籍信息:");
    println!("  🔖 书籍ID: {}", book.book_id);
    if let Some(title) = &book.metadata.title {
        println!("  📖 标题: {}", title);
    }
    let authors = book.metadata.author_names();
    if !authors.is_empty() {
        println!("  ✍️  作者: {}", authors.join(", "));
    }
    if let Some(language) = &book.metadata.language {
        println!("  🌐 语言: {}", language);
    }
    if let Some(publisher) = &book.metadata.publisher {
        println!("  🏢 出版社: {}", publisher);
    }

    println!("\n📚 章节: 共 {} 章，{} 条注释", book.chapters.len(), book.references.len());
    if verbose {
        for chapter in &book.chapters {
            let notes = book.references_for(&chapter.id).len();
            println!("  {}. {} [{}] ({} 条注释)", chapter.order + 1, chapter.title, chapter.href, notes);
        }
    }
}

/// 显示目录树
fn display_table_of_contents(book: &BookContent) {
    println!("\n🌳 目录树:");
    if book.table_of_contents.is_empty() {
        println!("  ⚠️  目录为空");
        return;
    }
    let total: usize = book.table_of_contents.iter().map(|entry| entry.total_entries()).sum();
    let depth = book.table_of_contents.iter().map(|entry| entry.max_depth()).max().unwrap_or(0);
    println!("  📊 共 {} 个条目，最大深度 {}", total, depth);
    println!("\n{}", TocDisplay(&book.table_of_contents));
}

fn display_fitting_summary(fitted: &FittedContent, config: &FittingConfig) {
    println!("\n📐 分页结果:");
    println!(
        "  视口: {}x{} ({:?})，每页可用高度 {:.1}px",
        config.container_width,
        config.container_height,
        config.layout_mode,
        config.available_height()
    );
    println!("  📄 共 {} 页", fitted.total_pages);

    let overflow = fitted.overflow_pages();
    if overflow > 0 {
        println!("  ⚠️  {} 页内容超出可用高度", overflow);
    }
}

fn display_pages(fitted: &FittedContent) {
    println!("\n📑 页面列表:");
    for page in &fitted.pages {
        let mut line = format!(
            "  {:>4}. {} | {} 块 | {:.0}/{:.0}px",
            page.page_index + 1,
            page.chapter_title,
            page.segments.len(),
            page.measured_height,
            page.available_height
        );
        if !page.references.is_empty() {
            line.push_str(&format!(" | {} 条注释", page.references.len()));
        }
        if page.overflow {
            line.push_str(" ⚠️");
        }
        println!("{}", line);
    }
}

/// 显示指定页的内容
fn display_page_content(fitted: &FittedContent, number: usize, format: ContentFormat) -> Result<()> {
    let page = number
        .checked_sub(1)
        .and_then(|index| fitted.page(index))
        .ok_or_else(|| EpubError::Structural(format!("页码 {} 超出范围（共 {} 页）", number, fitted.total_pages)))?;

    println!("\n📖 第 {} 页 - {}:", number, page.chapter_title);
    match format {
        ContentFormat::Html => println!("{}", page.html_content),
        ContentFormat::Text => {
            for segment in &page.segments {
                if !segment.text_content.is_empty() {
                    println!("  {}", segment.text_content);
                }
            }
        }
    }

    if !page.references.is_empty() {
        println!("\n  📝 本页注释:");
        for reference in &page.references {
            println!("    {} {}", reference.marker, reference.id);
        }
    }
    Ok(())
}
